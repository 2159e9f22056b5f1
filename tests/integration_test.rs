use anyhow::Result;
use parjoin::datagen::{self, DatasetShape};
use parjoin::{
    join_files, BuildSide, FilterPredicate, HashJoinExecutor, JoinConfig, JoinError, Row,
    ScanMode, Side, Table,
};
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

fn relation_file(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn generated_file(shape: &DatasetShape) -> Result<(NamedTempFile, Vec<Row>)> {
    let rows = datagen::generate(shape);
    let file = NamedTempFile::new()?;
    datagen::write_rows(file.path(), &rows)?;
    Ok((file, rows))
}

/// Count of pairs with equal `a` and `left.b > right.b`, without threads.
fn reference_count(left: &[Row], right: &[Row]) -> u64 {
    let mut by_key: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in right {
        by_key.entry(row.a).or_default().push(row.b);
    }
    for values in by_key.values_mut() {
        values.sort_unstable();
    }

    left.iter()
        .filter_map(|l| by_key.get(&l.a).map(|values| (l.b, values)))
        .map(|(b, values)| values.partition_point(|&v| v < b) as u64)
        .sum()
}

#[test]
fn test_scenario_from_files() -> Result<()> {
    let left = relation_file("1,5\n1,9\n2,3\n")?;
    let right = relation_file("1,7\n1,2\n3,1\n")?;

    let config = JoinConfig::new()
        .with_build_side(BuildSide::Left)
        .with_predicate(FilterPredicate::RightGreater);
    let outcome = join_files(left.path(), right.path(), config)?;
    assert_eq!(outcome.count, 1);
    assert_eq!(outcome.stats.build_side, Side::Left);

    let outcome = join_files(left.path(), right.path(), JoinConfig::default())?;
    assert_eq!(outcome.count, 3);
    Ok(())
}

#[test]
fn test_partition_count_invariance_with_straddling_records() -> Result<()> {
    // Record lengths vary so naive cut points land mid-record.
    let mut left = String::new();
    let mut right = String::new();
    for i in 0..300i64 {
        left.push_str(&format!("{},{}\n", i % 11, i * 7919 % 100_003));
        right.push_str(&format!("{},{}\n", i % 13, i * i % 997));
    }
    // No terminator on the final record.
    left.push_str("3,77777");
    let left_file = relation_file(&left)?;
    let right_file = relation_file(&right)?;

    let mut counts = Vec::new();
    for partitions in 1..=17 {
        let config = JoinConfig::new().with_partitions(partitions);
        counts.push(join_files(left_file.path(), right_file.path(), config)?.count);
    }
    assert!(counts.windows(2).all(|w| w[0] == w[1]), "{:?}", counts);

    let sequential = JoinConfig::new().with_scan_mode(ScanMode::Sequential);
    let expected = join_files(left_file.path(), right_file.path(), sequential)?.count;
    assert_eq!(counts[0], expected);
    Ok(())
}

#[test]
fn test_zero_overlap() -> Result<()> {
    let left = relation_file("1,10\n2,20\n3,30\n")?;
    let right = relation_file("4,1\n5,2\n6,3\n")?;
    let outcome = join_files(left.path(), right.path(), JoinConfig::default())?;
    assert_eq!(outcome.count, 0);
    assert_eq!(outcome.stats.partial_counts, vec![0; 4]);
    Ok(())
}

#[test]
fn test_empty_relation_either_side() -> Result<()> {
    let empty = relation_file("")?;
    let rows = relation_file("1,1\n2,2\n")?;

    for partitions in [1, 4, 8] {
        let config = JoinConfig::new().with_partitions(partitions);
        assert_eq!(join_files(empty.path(), rows.path(), config.clone())?.count, 0);
        assert_eq!(join_files(rows.path(), empty.path(), config.clone())?.count, 0);
        assert_eq!(join_files(empty.path(), empty.path(), config)?.count, 0);
    }
    Ok(())
}

#[test]
fn test_single_row_relations() -> Result<()> {
    let left = relation_file("42,9\n")?;
    let right = relation_file("42,8")?;
    for partitions in [1, 2, 16] {
        let config = JoinConfig::new().with_partitions(partitions);
        assert_eq!(join_files(left.path(), right.path(), config)?.count, 1);
    }
    Ok(())
}

#[test]
fn test_single_key_contention() -> Result<()> {
    let left: Vec<Row> = (0..2000).map(|i| Row::new(7, i)).collect();
    let right: Vec<Row> = (0..500).map(|i| Row::new(7, i * 3)).collect();
    let expected = reference_count(&left, &right);

    let left_file = NamedTempFile::new()?;
    let right_file = NamedTempFile::new()?;
    datagen::write_rows(left_file.path(), &left)?;
    datagen::write_rows(right_file.path(), &right)?;

    for build_side in [BuildSide::Left, BuildSide::Right] {
        let config = JoinConfig::new()
            .with_partitions(16)
            .with_build_side(build_side);
        let outcome = join_files(left_file.path(), right_file.path(), config)?;
        assert_eq!(outcome.count, expected);
        assert_eq!(outcome.stats.distinct_keys, 1);
    }
    Ok(())
}

#[test]
fn test_stress_partition_invariance() -> Result<()> {
    let (left_file, left) = generated_file(&DatasetShape {
        rows: 100_000,
        keys: 20_000,
        max_value: 1000,
        seed: 1,
    })?;
    let (right_file, right) = generated_file(&DatasetShape {
        rows: 100_000,
        keys: 20_000,
        max_value: 1000,
        seed: 2,
    })?;
    let expected = reference_count(&left, &right);
    assert!(expected > 0);

    for partitions in [1, 2, 4, 16] {
        let config = JoinConfig::new().with_partitions(partitions);
        let outcome = join_files(left_file.path(), right_file.path(), config)?;
        assert_eq!(outcome.count, expected, "partitions = {}", partitions);
        assert_eq!(outcome.stats.build_rows, 100_000);
        assert_eq!(outcome.stats.probe_rows, 100_000);
        assert_eq!(outcome.stats.partial_counts.len(), partitions);
    }
    Ok(())
}

#[test]
fn test_repeated_runs_agree() -> Result<()> {
    let (left_file, _) = generated_file(&DatasetShape {
        rows: 20_000,
        keys: 100,
        max_value: 50,
        seed: 3,
    })?;
    let (right_file, _) = generated_file(&DatasetShape {
        rows: 20_000,
        keys: 100,
        max_value: 50,
        seed: 4,
    })?;

    let config = JoinConfig::new().with_partitions(8);
    let first = join_files(left_file.path(), right_file.path(), config.clone())?.count;
    for _ in 0..5 {
        let again = join_files(left_file.path(), right_file.path(), config.clone())?.count;
        assert_eq!(again, first);
    }
    Ok(())
}

#[test]
fn test_sequential_and_partitioned_agree() -> Result<()> {
    let (left_file, left) = generated_file(&DatasetShape {
        rows: 10_000,
        keys: 500,
        max_value: 100,
        seed: 5,
    })?;
    let (right_file, right) = generated_file(&DatasetShape {
        rows: 7_000,
        keys: 500,
        max_value: 100,
        seed: 6,
    })?;
    let expected = reference_count(&left, &right);

    for scan_mode in [ScanMode::Partitioned, ScanMode::Sequential] {
        let config = JoinConfig::new().with_scan_mode(scan_mode);
        let outcome = join_files(left_file.path(), right_file.path(), config)?;
        assert_eq!(outcome.count, expected, "{:?}", scan_mode);
    }
    Ok(())
}

#[test]
fn test_build_side_invariance() -> Result<()> {
    let (left_file, _) = generated_file(&DatasetShape {
        rows: 3_000,
        keys: 40,
        max_value: 30,
        seed: 9,
    })?;
    let (right_file, _) = generated_file(&DatasetShape {
        rows: 5_000,
        keys: 40,
        max_value: 30,
        seed: 10,
    })?;

    for predicate in [FilterPredicate::LeftGreater, FilterPredicate::RightGreater] {
        let mut counts = Vec::new();
        for build_side in [BuildSide::Auto, BuildSide::Left, BuildSide::Right] {
            let config = JoinConfig::new()
                .with_build_side(build_side)
                .with_predicate(predicate);
            counts.push(join_files(left_file.path(), right_file.path(), config)?.count);
        }
        assert!(counts.iter().all(|&c| c == counts[0]), "{:?}", counts);
    }
    Ok(())
}

#[test]
fn test_malformed_record_is_fatal() -> Result<()> {
    let good = relation_file("1,1\n2,2\n3,3\n")?;
    let bad = relation_file("1,1\n2,x2,9\n3,3\n")?;

    for (left, right) in [(&good, &bad), (&bad, &good)] {
        for scan_mode in [ScanMode::Partitioned, ScanMode::Sequential] {
            let config = JoinConfig::new().with_scan_mode(scan_mode);
            match join_files(left.path(), right.path(), config) {
                Err(JoinError::Parse { offset, .. }) => assert_eq!(offset, 4),
                other => panic!("expected parse error, got {:?}", other),
            }
        }
    }
    Ok(())
}

#[test]
fn test_missing_file() {
    let result = join_files(
        "/nonexistent/relation1",
        "/nonexistent/relation2",
        JoinConfig::default(),
    );
    assert!(matches!(result, Err(JoinError::Open { .. })));
}

#[test]
fn test_invalid_config() {
    for config in [
        JoinConfig::new().with_partitions(0),
        JoinConfig::new().with_row_channel_capacity(0),
        JoinConfig::new().with_match_channel_capacity(0),
        JoinConfig::new().with_read_block_size(0),
        JoinConfig::new().with_partitions(parjoin::config::MAX_PARTITIONS + 1),
        JoinConfig::new().with_partitions(usize::MAX),
    ] {
        assert!(matches!(
            HashJoinExecutor::new(config),
            Err(JoinError::InvalidConfig(_))
        ));
    }
}

#[test]
fn test_tables_are_reusable() -> Result<()> {
    let left_file = relation_file("1,5\n1,9\n2,3\n")?;
    let right_file = relation_file("1,7\n1,2\n3,1\n")?;
    let mut left = Table::open(Side::Left, left_file.path())?;
    let mut right = Table::open(Side::Right, right_file.path())?;

    let executor = HashJoinExecutor::new(JoinConfig::default())?;
    let first = executor.execute(&mut left, &mut right)?.count;
    let second = executor.execute(&mut left, &mut right)?.count;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_oversized_partition_count_is_rejected() -> Result<()> {
    let file = relation_file("1,2\n3,4\n")?;
    let config = JoinConfig::new().with_partitions(usize::MAX);
    match join_files(file.path(), file.path(), config) {
        Err(JoinError::InvalidConfig(msg)) => assert!(msg.contains("at most")),
        other => panic!("expected invalid config, got {:?}", other),
    }
    Ok(())
}
