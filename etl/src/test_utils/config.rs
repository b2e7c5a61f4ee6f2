use std::path::{Path, PathBuf};

use etl_config::shared::{
    ExternalCommandConfig, LocalWarehouseConfig, MaterializerConfig, MergeConfig, PipelineConfig,
    SourceConfig, StageSwitches, WarehouseConfig,
};
use secrecy::SecretString;
use uuid::Uuid;

/// Creates a fresh directory under the system temp directory.
pub fn scratch_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("scratch directory must be creatable");

    dir
}

/// Configuration keeping every file of a run under `dir`, with every stage switched on except
/// provisioning.
pub fn test_config(dir: &Path) -> MaterializerConfig {
    let mut config = MaterializerConfig {
        source: SourceConfig {
            url: "jdbc:mysql:thin://source:3306".to_owned(),
            username: "etl".to_owned(),
            password: SecretString::new("source-secret".to_owned()),
            schema: "shop".to_owned(),
        },
        warehouse: WarehouseConfig {
            url: "jdbc:hive2://warehouse:10000".to_owned(),
            username: "etl".to_owned(),
            password: SecretString::new("warehouse-secret".to_owned()),
            sql_cli: WarehouseConfig::DEFAULT_SQL_CLI.to_owned(),
        },
        tools: Default::default(),
        pipeline: PipelineConfig {
            metadata_path: dir.join("meta.json"),
            ..PipelineConfig::default()
        },
        merge: MergeConfig {
            local: LocalWarehouseConfig {
                root: dir.join("warehouse"),
            },
            ..MergeConfig::default()
        },
        reconciliation: Default::default(),
        logging: Default::default(),
    };
    config.tools.ddl_generator.script_dir = dir.to_path_buf();
    config.merge.hive.script_path = dir.join("materialize.hql");
    config.merge.hive.log_path = dir.join("materialize.out");
    config.reconciliation.log_path = dir.join("load.out");

    config
}

/// Switches every stage to `on`, configuring a provisioning command when needed.
pub fn with_all_stages(mut config: MaterializerConfig, on: bool) -> MaterializerConfig {
    config.pipeline.stages = if on {
        StageSwitches {
            provisioning: true,
            ..StageSwitches::default()
        }
    } else {
        StageSwitches::none()
    };
    if on {
        config.pipeline.provisioning = Some(ExternalCommandConfig {
            program: "provision".to_owned(),
            args: Vec::new(),
        });
    }

    config
}
