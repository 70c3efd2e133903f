use std::fmt;


/// Класс срочности задачи
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Urgency {
    Urgent,
    Normal,
}

impl Urgency {
    #[inline]
    pub fn is_urgent(self) -> bool {
        matches!(self, Urgency::Urgent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Urgent => "urgent",
            Urgency::Normal => "normal",
        }
    }
}

impl From<bool> for Urgency {
    fn from(urgent: bool) -> Self {
        if urgent {
            Urgency::Urgent
        } else {
            Urgency::Normal
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Created -> Started -> Stopped, Stopped is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Created = 0,
    Started = 1,
    Stopped = 2,
}

impl PoolState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PoolState::Created,
            1 => PoolState::Started,
            _ => PoolState::Stopped,
        }
    }
}


#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub active_workers: usize,
    pub active_urgent: usize,
    pub active_normal: usize,
    pub queued_urgent: usize,
    pub queued_normal: usize,
    pub completed_tasks: usize,
}

impl PoolMetrics {
    pub fn queued_tasks(&self) -> usize {
        self.queued_urgent + self.queued_normal
    }

    pub fn is_idle(&self) -> bool {
        self.active_workers == 0 && self.queued_tasks() == 0
    }

    /// Доля занятых воркеров относительно заданного потолка
    pub fn utilization(&self, capacity: usize) -> f64 {
        if capacity == 0 {
            return 0.0;
        }
        self.active_workers as f64 / capacity as f64
    }
}
