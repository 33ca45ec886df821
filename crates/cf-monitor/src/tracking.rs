use cf_core::ID;

/// Opaque handle returned by `start_operation`; pair it with the matching
/// `end_operation` call.
pub type OperationId = ID<OperationState>;
/// Opaque handle returned by `start_span`; pair it with the matching
/// `end_span` call.
pub type SpanId = ID<SpanState>;

/// Outcome recorded when an operation ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    Failure,
}

pub struct OperationState {
    pub(crate) name: String,
    pub(crate) tags: Vec<(String, String)>,
    pub(crate) start_ms: i64,
}

pub struct SpanState {
    pub(crate) category: String,
    pub(crate) label: String,
    pub(crate) parent: Option<SpanId>,
    pub(crate) start_ms: i64,
}
