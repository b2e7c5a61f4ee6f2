mod local_merge_test;
mod merge_properties_test;
mod pipeline_test;
mod reducer_stream_test;
