pub mod delivery;
pub mod handle;
pub mod registry;
pub mod retry;
pub mod task;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use delivery::{
    is_fifteen_digit_id, DeliveryPlan, DeliveryStrategy, NumericRecipientDelivery,
    StandardDelivery,
};
pub use handle::TaskHandle;
pub use registry::TaskRegistry;
pub use retry::RetryPolicy;
pub use task::TaskDeps;
