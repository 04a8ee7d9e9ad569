use exp_attack::logging::init_file_logger;
use exp_attack::{AttackConfig, ExpAttackL1};
use log::LevelFilter;
use std::fs;

mod common;

#[test]
fn test_attack_logs_success_rate() {
    let path = std::env::temp_dir().join(format!("exp_attack_{}.log", std::process::id()));
    let _handle = init_file_logger(&path, LevelFilter::Info).unwrap();

    let dnn = common::make_classifier(8, 10, 0);
    let config = AttackConfig {
        confidence: 1.,
        max_iter: 3,
        ..AttackConfig::default()
    };
    let attack = ExpAttackL1::new(&dnn, config).unwrap();
    attack
        .generate(&common::cifar_batch(2, 1).view(), None)
        .unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("WARN - confidence"));
    assert!(contents.contains("ExpAttackL1 batch 2/2"));
    assert!(contents.contains("Success rate of ExpAttackL1 attack"));
    assert!(!contents.contains("DEBUG"));
    fs::remove_file(&path).unwrap();
}
