/// Game record persistence backends.
pub mod game_store;
/// Storage abstraction layer errors.
pub mod storage;
