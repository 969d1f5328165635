/*!
This crate holds small utilities shared by the other concuno crates.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod progress_counter;
