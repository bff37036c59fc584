//! REST-Handler der Betreiber-API

pub mod kanaele;
pub mod werkzeuge;
