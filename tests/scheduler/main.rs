#![allow(
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

mod bounds;
mod common;
mod concurrency;
mod end_to_end;
mod failures;
mod out_of_order;
mod reproducibility;
