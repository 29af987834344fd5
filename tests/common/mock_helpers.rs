//! Mock construction helpers

use packetscope::capture::MockCaptureSource;
use packetscope::{PipelineController, RawFrame};
use std::sync::Arc;

/// Device name every helper starts on
pub const MOCK_DEVICE: &str = "mock0";

/// A pipeline over a mock source whose script is `frames`
///
/// The returned source handle can inject frames and flip failure switches.
pub fn mock_pipeline(
    frames: Vec<RawFrame>,
    workers: usize,
) -> (Arc<MockCaptureSource>, PipelineController) {
    let source = Arc::new(MockCaptureSource::new().with_frames(frames));
    let controller =
        PipelineController::new(source.clone(), workers).expect("worker pool should start");
    (source, controller)
}

/// Ids of every stored packet, in store order
pub fn stored_ids(controller: &PipelineController) -> Vec<u64> {
    controller
        .store()
        .get_all_packets()
        .iter()
        .map(|p| p.id)
        .collect()
}
