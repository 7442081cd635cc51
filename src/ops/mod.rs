pub mod predict;
pub mod replay;
pub mod stroke;
