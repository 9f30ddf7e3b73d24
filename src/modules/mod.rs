pub mod health;
pub mod taxes;
