// Market data module entrypoint
pub mod adapters;       // venue-specific fetchers (REST pollers, coinbase websocket)
pub mod normaliser;     // converts wire strings -> typed levels
pub mod router;         // applies events to the book and drives the sinks
