//! Id generation for executions and computations. Kept as a single
//! narrow module (rather than spread across call sites) so the id
//! format can change in one place.

use uuid::Uuid;

pub fn new_execution_id() -> String {
    format!("exec-{}", Uuid::new_v4())
}

pub fn new_computation_id() -> String {
    format!("comp-{}", Uuid::new_v4())
}
