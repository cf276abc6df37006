use serde::{Deserialize, Serialize};

/// Incoming transcription job pulled from the work queue.
///
/// Producers serialize this record into a MessagePack map (see
/// [`crate::codec`]); the worker treats it as read-only for the lifetime of
/// the delivery. The file at [`fp`](Self::fp) is owned by the worker from
/// delivery until it is removed after a fully successful cycle.
///
/// `deny_unknown_fields` makes extra keys a decode error rather than a
/// silently-dropped field, so producer/worker schema drift is caught at the
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptionRequest {
    /// Opaque job identifier assigned by the producer. Returned unchanged in
    /// the result for correlation.
    pub request_id: String,

    /// Filesystem path to the audio file to transcribe.
    pub fp: String,
}
