/// Healthy and degraded load assignments across priority levels, in integer
/// percent. For a routable cluster the entries of both vectors together sum
/// to 100.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriorityLoad {
    pub healthy: Vec<u32>,
    pub degraded: Vec<u32>,
}

// === impl PriorityLoad ===

impl PriorityLoad {
    /// A load vector that sends everything to healthy hosts, level by
    /// level.
    pub fn from_healthy(healthy: Vec<u32>) -> Self {
        let degraded = vec![0; healthy.len()];
        Self { healthy, degraded }
    }

    pub fn levels(&self) -> usize {
        self.healthy.len()
    }

    pub fn resize(&mut self, levels: usize) {
        self.healthy.resize(levels, 0);
        self.degraded.resize(levels, 0);
    }

    pub fn fill_zero(&mut self) {
        self.healthy.fill(0);
        self.degraded.fill(0);
    }

    /// First level with healthy load assigned, which is where host
    /// selection starts.
    pub fn first_healthy_level(&self) -> Option<usize> {
        self.healthy.iter().position(|&load| load != 0)
    }

    pub fn total(&self) -> u32 {
        self.healthy.iter().sum::<u32>() + self.degraded.iter().sum::<u32>()
    }
}
