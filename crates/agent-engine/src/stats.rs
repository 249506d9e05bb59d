//! Allocator and system statistics samplers backing the gauge pollers.

use metrod_core::MetricSample;
use sysinfo::{Pid, System};

/// The fixed allocator-statistics gauge set. Every name is emitted on every
/// poll tick; names with no process-level counterpart report zero rather
/// than being skipped, so the server-side view keeps a stable shape.
pub(crate) const RUNTIME_GAUGES: [&str; 27] = [
    "Alloc",
    "BuckHashSys",
    "Frees",
    "GCCPUFraction",
    "GCSys",
    "HeapAlloc",
    "HeapIdle",
    "HeapInuse",
    "HeapObjects",
    "HeapReleased",
    "HeapSys",
    "LastGC",
    "Lookups",
    "MCacheInuse",
    "MCacheSys",
    "MSpanInuse",
    "MSpanSys",
    "Mallocs",
    "NextGC",
    "NumForcedGC",
    "NumGC",
    "OtherSys",
    "PauseTotalNs",
    "StackInuse",
    "StackSys",
    "Sys",
    "TotalAlloc",
];

pub(crate) const RANDOM_VALUE: &str = "RandomValue";

/// Samples this process's memory figures into the fixed gauge set.
pub(crate) struct RuntimeSampler {
    sys: System,
    pid: Pid,
}

impl RuntimeSampler {
    pub(crate) fn new() -> Self {
        Self {
            sys: System::new(),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    pub(crate) fn sample(&mut self) -> Vec<MetricSample> {
        let (resident, virtual_mem) = if self.sys.refresh_process(self.pid) {
            self.sys
                .process(self.pid)
                .map(|p| (p.memory() as f64, p.virtual_memory() as f64))
                .unwrap_or((0.0, 0.0))
        } else {
            (0.0, 0.0)
        };

        let mut samples: Vec<MetricSample> = RUNTIME_GAUGES
            .iter()
            .map(|name| {
                let value = match *name {
                    "Alloc" | "HeapAlloc" | "HeapInuse" => resident,
                    "Sys" | "HeapSys" => virtual_mem,
                    _ => 0.0,
                };
                MetricSample::gauge(*name, value)
            })
            .collect();
        samples.push(MetricSample::gauge(RANDOM_VALUE, rand::random::<f64>()));
        samples
    }
}

/// Samples host-wide memory and per-CPU utilization.
pub(crate) struct SystemSampler {
    sys: System,
}

impl SystemSampler {
    pub(crate) fn new() -> Self {
        Self { sys: System::new() }
    }

    pub(crate) fn sample(&mut self) -> Vec<MetricSample> {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_usage();

        let mut samples = vec![
            MetricSample::gauge("TotalMemory", self.sys.total_memory() as f64),
            MetricSample::gauge("FreeMemory", self.sys.free_memory() as f64),
        ];
        // Utilization is measured between consecutive refreshes; the first
        // tick reports zero.
        for (idx, cpu) in self.sys.cpus().iter().enumerate() {
            samples.push(MetricSample::gauge(
                format!("CPUutilization{idx}"),
                f64::from(cpu.cpu_usage()),
            ));
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrod_core::MetricKind;

    #[test]
    fn runtime_sampler_emits_the_full_fixed_set() {
        let mut sampler = RuntimeSampler::new();
        let samples = sampler.sample();
        assert_eq!(samples.len(), RUNTIME_GAUGES.len() + 1);

        let names: Vec<&str> = samples.iter().map(|s| s.name.as_str()).collect();
        for expected in RUNTIME_GAUGES {
            assert!(names.contains(&expected), "missing gauge {expected}");
        }
        assert!(names.contains(&RANDOM_VALUE));
        assert!(samples.iter().all(|s| s.kind == MetricKind::Gauge));
        assert!(samples.iter().all(|s| s.value.is_some()));
    }

    #[test]
    fn random_value_is_a_unit_interval_double() {
        let mut sampler = RuntimeSampler::new();
        for _ in 0..10 {
            let samples = sampler.sample();
            let random = samples
                .iter()
                .find(|s| s.name == RANDOM_VALUE)
                .and_then(|s| s.value)
                .unwrap();
            assert!((0.0..1.0).contains(&random));
        }
    }

    #[test]
    fn system_sampler_reports_memory_and_cpus() {
        let mut sampler = SystemSampler::new();
        let samples = sampler.sample();
        let names: Vec<&str> = samples.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"TotalMemory"));
        assert!(names.contains(&"FreeMemory"));
        assert!(names.iter().any(|n| n.starts_with("CPUutilization")));
    }
}
