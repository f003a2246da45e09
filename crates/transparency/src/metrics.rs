use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

pub(crate) static HISTORY_OPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "veritree_history_operations_total",
        "History tree operations served, labeled by operation.",
        &["op"]
    )
    .unwrap()
});

pub(crate) static HYPER_OPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "veritree_hyper_operations_total",
        "Hyper tree operations served, labeled by operation.",
        &["op"]
    )
    .unwrap()
});
