mod merge_test;
mod pipeline_test;
mod warehouse_test;
