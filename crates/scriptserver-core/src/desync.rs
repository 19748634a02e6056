//! TAI desynchronization tracking between the device clock and the local clock.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::constants::{DESYNC_HISTORY_LEN, DELIMITER, MessageType, TAI_EPOCH_OFFSET, TAI_FIELD_POSITION};

/// Bounded history of the latest desync samples, oldest evicted first.
#[derive(Debug, Default, Clone)]
pub struct DesyncHistory {
    samples: VecDeque<i64>,
}

impl DesyncHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: i64) {
        self.samples.push_back(sample);
        while self.samples.len() > DESYNC_HISTORY_LEN {
            self.samples.pop_front();
        }
    }

    /// Mean of the recorded samples, truncated toward zero; zero when empty.
    pub fn average(&self) -> i64 {
        if self.samples.is_empty() {
            return 0;
        }
        self.samples.iter().sum::<i64>() / self.samples.len() as i64
    }

    pub fn samples(&self) -> impl Iterator<Item = i64> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Record the desync carried by an `RX_RF` datagram, if any.
    ///
    /// Other message types, a missing timestamp field and a zero timestamp are
    /// ignored. Returns the recorded sample.
    pub fn observe(&mut self, message: &str, now_secs: i64) -> Option<i64> {
        if MessageType::of_message(message) != Some(MessageType::RxRf) {
            return None;
        }
        let Some(field) = message.split(DELIMITER as char).nth(TAI_FIELD_POSITION) else {
            warn!(message, "no TAI field in RX_RF message");
            return None;
        };
        let digits: String = field
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let tai: i64 = digits.parse().ok().filter(|v| *v != 0)?;
        let desync = tai - now_secs - TAI_EPOCH_OFFSET;
        debug!(desync, "TAI desync");
        self.record(desync);
        Some(desync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_three() {
        let mut h = DesyncHistory::new();
        for s in [1, 2, 3, 4] {
            h.record(s);
        }
        assert_eq!(h.samples().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(h.average(), 3);
    }

    #[test]
    fn empty_average_is_zero() {
        assert_eq!(DesyncHistory::new().average(), 0);
    }

    #[test]
    fn average_truncates_toward_zero() {
        let mut h = DesyncHistory::new();
        h.record(-1);
        h.record(-2);
        assert_eq!(h.average(), -1);
    }

    #[test]
    fn observe_rx_rf_timestamp() {
        let mut h = DesyncHistory::new();
        let now = 1_000;
        let tai = now + TAI_EPOCH_OFFSET + 5;
        let msg = format!("RX_RF,1,APP,TL,NL,DLL,x,y,{tai},123");
        assert_eq!(h.observe(&msg, now), Some(5));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn observe_ignores_other_types_and_zero() {
        let mut h = DesyncHistory::new();
        assert_eq!(h.observe("RX_CFG,1,APP,a,b,c,d,e,99", 0), None);
        assert_eq!(h.observe("RX_RF,1,APP,TL,NL,DLL,x,y,0", 0), None);
        assert_eq!(h.observe("RX_RF,1,APP", 0), None);
        assert!(h.is_empty());
    }
}
