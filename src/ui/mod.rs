//! Front-end boundary: the prompts the session asks for, and the console
//! implementation the binary uses.

pub mod console;
pub mod dialogs;
