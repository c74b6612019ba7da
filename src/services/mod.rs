pub mod availability;
pub mod holds;
pub mod orders;
pub mod sweeper;
pub mod webhooks;

pub use holds::HoldService;
pub use orders::OrderService;
pub use webhooks::WebhookService;
