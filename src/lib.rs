// TODO Bind expressions with a reusable context per effect instead of building a fresh HashMapContext every activation.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod drop_pool;
pub mod effect;
pub mod expressions;
pub mod feature;
pub mod feature_config;
pub mod feature_kind;
pub mod feature_store;
pub mod item_manager;
pub mod modifiers;
pub mod prelude;
pub mod reference_resolver;
pub mod settings;
pub mod stat_addressing;
pub mod stat_error;
