//! The API endpoint URIs.

/// The root route, a plain-text hello that doubles as a liveness check.
pub const ROOT: &str = "/";
/// The route that receives inbound WhatsApp webhook deliveries.
pub const WEBHOOK: &str = "/webhook";
