//! Outbound record dispatch

use tokio::sync::mpsc;
use tracing::warn;

use super::protocol::OutboundRecord;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Outbound channel closed")]
    Closed,

    #[error("Outbound channel full, dropped {0} record")]
    Full(&'static str),
}

/// Sink for records produced by the simulation
pub trait Dispatch {
    fn dispatch(&mut self, record: OutboundRecord) -> Result<(), DispatchError>;

    /// Dispatch, logging instead of failing
    fn send_or_log(&mut self, record: OutboundRecord) {
        if let Err(e) = self.dispatch(record) {
            warn!(error = %e, "Failed to dispatch record");
        }
    }
}

/// Forwards records into a bounded tokio channel without blocking the tick
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<OutboundRecord>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::Sender<OutboundRecord>) -> Self {
        Self { tx }
    }
}

impl Dispatch for ChannelDispatcher {
    fn dispatch(&mut self, record: OutboundRecord) -> Result<(), DispatchError> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(record) => DispatchError::Full(record.kind()),
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

/// Keeps every record in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    pub records: Vec<OutboundRecord>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<OutboundRecord> {
        std::mem::take(&mut self.records)
    }
}

impl Dispatch for RecordingDispatcher {
    fn dispatch(&mut self, record: OutboundRecord) -> Result<(), DispatchError> {
        self.records.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_dispatcher_reports_full_and_closed() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut dispatcher = ChannelDispatcher::new(tx);

        let record = OutboundRecord::UseSkill { skill_id: 1001 };
        dispatcher.dispatch(record.clone()).unwrap();
        assert!(matches!(
            dispatcher.dispatch(record.clone()),
            Err(DispatchError::Full("use_skill"))
        ));

        assert_eq!(rx.recv().await, Some(record.clone()));
        drop(rx);
        assert!(matches!(dispatcher.dispatch(record), Err(DispatchError::Closed)));
    }

    #[test]
    fn test_recording_dispatcher() {
        let mut dispatcher = RecordingDispatcher::new();
        dispatcher.send_or_log(OutboundRecord::HpMpChange { hp: 10, mp: 3 });
        assert_eq!(dispatcher.take().len(), 1);
        assert!(dispatcher.records.is_empty());
    }
}
