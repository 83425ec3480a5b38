pub mod memory_counter_store;
