//! Flutter bridge over CloudNote core.

pub mod api;
