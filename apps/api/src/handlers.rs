pub mod health;
pub mod logs;
pub mod stream;
pub mod tenants;
