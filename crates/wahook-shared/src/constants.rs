/// Base URL of the Meta Graph API.
pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com";

/// Graph API version used when none is configured.
pub const DEFAULT_GRAPH_API_VERSION: &str = "v18.0";

/// Value of `messaging_product` in every outbound request.
pub const MESSAGING_PRODUCT: &str = "whatsapp";

/// `hub.mode` value sent by Meta during webhook verification.
pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Maximum text body accepted by the Cloud API.
pub const MAX_TEXT_LENGTH: usize = 4096;
