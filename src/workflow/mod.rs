pub mod fix;
pub mod propagate;
pub mod session;
pub mod transition;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
