use gng_terminal::cluster::{ClusterConfig, ClusterFeature, cluster_games};
use gng_terminal::error::PipelineError;
use gng_terminal::model::{GameIndexedRow, ImputeMethod};

fn game(player: &str, game_index: u32, goals: Option<f64>, team_pts: f64) -> GameIndexedRow {
    GameIndexedRow {
        last: player.to_string(),
        first: "Test".to_string(),
        team: Some("Red".to_string()),
        team_pts: Some(team_pts),
        goals,
        total: goals.map(|g| g * 2.0),
        game_index,
        is_imputed: goals.is_none(),
        impute_method: if goals.is_none() {
            ImputeMethod::PlayerAverage
        } else {
            ImputeMethod::Observed
        },
        player: format!("Test {player}"),
        rank_in_game: Some(1),
        cumulative_goals: goals,
        cumulative_score: goals.map(|g| g * 2.0),
        cumulative_rank: Some(1),
        cumulative_percentile: Some(1.0),
        cumulative_goals_percentile: Some(1.0),
    }
}

fn two_groups() -> Vec<GameIndexedRow> {
    vec![
        game("A", 1, Some(0.0), 0.0),
        game("B", 1, Some(1.0), 0.0),
        game("C", 1, Some(0.0), 1.0),
        game("D", 1, Some(9.0), 3.0),
        game("E", 1, Some(10.0), 3.0),
        game("F", 1, Some(9.0), 4.0),
        game("G", 1, None, 3.0),
    ]
}

fn config(k: usize, seed: u64) -> ClusterConfig {
    ClusterConfig {
        features: vec![ClusterFeature::Goals, ClusterFeature::TeamPoints],
        k,
        seed,
        ..ClusterConfig::default()
    }
}

#[test]
fn separates_low_and_high_scorers() {
    let rows = two_groups();
    let result = cluster_games(&rows, &config(2, 7)).unwrap();
    let labels = &result.labels;
    assert_eq!(labels[6], None);
    assert_eq!(labels[0], labels[1]);
    assert_eq!(labels[0], labels[2]);
    assert_eq!(labels[3], labels[4]);
    assert_eq!(labels[3], labels[5]);
    assert_ne!(labels[0], labels[3]);

    let mut sizes = result.sizes();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![3, 3]);
}

#[test]
fn same_seed_same_result() {
    let rows = two_groups();
    let a = cluster_games(&rows, &config(3, 11)).unwrap();
    let b = cluster_games(&rows, &config(3, 11)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn k_must_fit_the_complete_rows() {
    let rows = two_groups();
    for k in [0, 7] {
        let err = cluster_games(&rows, &config(k, 1)).unwrap_err();
        assert!(matches!(err, PipelineError::Cluster(_)), "k={k}");
    }
    assert!(cluster_games(&rows, &config(6, 1)).is_ok());
}
