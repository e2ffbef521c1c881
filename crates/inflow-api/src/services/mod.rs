// Services layer for business logic
// Services own the flow between routes and storage; routes stay thin

pub mod inbox;
pub mod ingest;

pub use inbox::InboxService;
pub use ingest::IngestService;
