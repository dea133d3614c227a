//! HTTP gateway for the dispatch core (§4.G): translates JSON requests
//! into scheduler `Task`s and turns the result back into a synchronous
//! or streamed response.

pub mod error;
pub mod routes;
pub mod state;
pub mod wire;
