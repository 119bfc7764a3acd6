pub mod instance;
pub mod runner;

pub use instance::{group_instances, instance_key, rotation_suffix, InstanceFiles, LogInstance};
pub use runner::{
    process_file, process_instance, run_instances, FileSummary, InstanceOutcome, PipelineError,
    RunnerSettings,
};
