//! Plan materialization: converts a cost-annotated Path tree into an
//! executor-ready Plan tree.

pub mod builders;
pub mod clauses;
pub mod cost;
pub mod dispatch;
pub mod expr;
pub mod indexqual;
pub mod path;
pub mod plan;
pub mod sort;


pub use builders::{
    make_agg, make_append, make_functionscan, make_group, make_hash, make_hashjoin,
    make_indexscan, make_limit, make_material, make_mergejoin, make_nestloop, make_result,
    make_seqscan, make_setop, make_subqueryscan, make_tidscan, make_unique,
};
pub use dispatch::create_plan;
pub use path::Path;
pub use plan::Plan;
pub use sort::make_sort_from_pathkeys as make_sort;
