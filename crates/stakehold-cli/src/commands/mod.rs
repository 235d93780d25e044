pub mod aux;
pub mod events;
pub mod run;
