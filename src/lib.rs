// World state and change notification
pub mod state;

// Subscriber queues, registry and broadcast
pub mod subscription;

// HTTP and WebSocket APIs
pub mod api;

// File and environment configuration
pub mod config;
