pub mod run_manifest;
