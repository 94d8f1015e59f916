pub mod address;
pub mod cart;
pub mod payment;
pub mod shipping;

pub use address::{Address, Country};
pub use cart::{CartItem, Customer, CustomerAttributes, ShoppingCart};
pub use payment::{FormData, ProcessPaymentRequest};
pub use shipping::ShippingOption;
