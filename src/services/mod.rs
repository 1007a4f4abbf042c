/// OpenAPI documentation generation.
pub mod documentation;
/// Request handling for game, player and score operations.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Server-Sent Events stream of game updates.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
