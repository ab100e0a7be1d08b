use chrono::Utc;
use ethereum_types::{Address, H256};
use ethernity_core::{
    BlockRange, CandidatePair, Error, MiningRun, OverlapEvidence, PairId, RunId, TransactionRef,
    Verdict, VerdictFilter, VerdictRecord, VerdictStatus,
};

fn tx(block: u64, index: usize) -> TransactionRef {
    TransactionRef {
        block_number: block,
        hash: H256::from_low_u64_be(0xf000 - index as u64),
        index,
        from: Address::from_low_u64_be(index as u64 + 1),
        to: Some(Address::repeat_byte(0x42)),
        selector: Some([0x38, 0xed, 0x17, 0x39]),
    }
}

#[test]
fn pair_is_canonical_regardless_of_argument_order() {
    let a = CandidatePair::new(tx(9, 1), tx(9, 4), 5, OverlapEvidence::default()).unwrap();
    let b = CandidatePair::new(tx(9, 4), tx(9, 1), 5, OverlapEvidence::default()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.first.index, 1);
    assert_eq!(a.window_distance, 3);

    // o hash menor vem primeiro no identificador, independente do índice
    let id = a.id();
    assert_eq!(id.low, tx(9, 4).hash);
    assert_eq!(id, PairId::new(tx(9, 1).hash, tx(9, 4).hash));
}

#[test]
fn pair_rejects_invalid_combinations() {
    let window = CandidatePair::new(tx(9, 0), tx(9, 6), 5, OverlapEvidence::default());
    assert!(matches!(window, Err(Error::ValidationError(_))));

    let blocks = CandidatePair::new(tx(9, 0), tx(10, 1), 5, OverlapEvidence::default());
    assert!(matches!(blocks, Err(Error::ValidationError(_))));

    let same = CandidatePair::new(tx(9, 2), tx(9, 2), 5, OverlapEvidence::default());
    assert!(same.is_err());
}

#[test]
fn pair_id_text_form_round_trips() {
    let id = PairId::new(H256::repeat_byte(0xbb), H256::repeat_byte(0xaa));
    let text = id.to_string();
    assert!(text.starts_with("0xaaaa"));
    assert_eq!(text.parse::<PairId>().unwrap(), id);

    assert!("0xaa".parse::<PairId>().is_err());
    let twice = format!("0x{:x}_0x{:x}", H256::repeat_byte(1), H256::repeat_byte(1));
    assert!(twice.parse::<PairId>().is_err());
}

#[test]
fn run_id_depends_on_every_parameter() {
    let run = MiningRun {
        block_range: BlockRange::new(100, 200).unwrap(),
        window_size: 5,
        duplicate_cap: Some(3),
        skip_same_sender: true,
    };
    assert_eq!(run.run_id("slot"), run.run_id("slot"));
    assert!(run.run_id("slot").0.starts_with("run-100-200-"));

    let others = [
        MiningRun { window_size: 6, ..run },
        MiningRun { duplicate_cap: None, ..run },
        MiningRun { block_range: BlockRange::new(100, 201).unwrap(), ..run },
        MiningRun { skip_same_sender: false, ..run },
    ];
    for other in others {
        assert_ne!(other.run_id("slot"), run.run_id("slot"));
    }
    assert_ne!(run.run_id("address"), run.run_id("slot"));
}

#[test]
fn block_range_parses_and_serializes_as_text() {
    let range: BlockRange = "0x64-200".parse().unwrap();
    assert_eq!(range, BlockRange::new(100, 200).unwrap());
    assert_eq!(range.len(), 101);
    assert!(range.contains(200) && !range.contains(201));

    assert_eq!(serde_json::to_string(&range).unwrap(), "\"100-200\"");
    let back: BlockRange = serde_json::from_str("\"100-200\"").unwrap();
    assert_eq!(back, range);

    assert!("200-100".parse::<BlockRange>().is_err());
    assert!("100".parse::<BlockRange>().is_err());
    assert!(serde_json::from_str::<BlockRange>("\"x-1\"").is_err());
}

#[test]
fn full_block_range_length_saturates() {
    let everything = BlockRange::new(0, u64::MAX).unwrap();
    assert_eq!(everything.len(), u64::MAX);
    assert_eq!(BlockRange::new(7, 7).unwrap().len(), 1);
}

#[test]
fn run_records_without_sender_flag_default_to_skipping() {
    let run: MiningRun = serde_json::from_value(serde_json::json!({
        "block_range": "1-9",
        "window_size": 4,
        "duplicate_cap": null
    }))
    .unwrap();
    assert!(run.skip_same_sender);
}

#[test]
fn only_error_verdicts_are_stale() {
    assert!(Verdict::Confirmed.is_final());
    assert!(Verdict::NotConfirmed.is_final());
    assert!(Verdict::Inconclusive("gas".into()).is_final());
    assert!(!Verdict::Error("timeout".into()).is_final());
    assert_eq!(Verdict::Inconclusive("x".into()).status(), VerdictStatus::Inconclusive);
    assert_eq!("not_confirmed".parse::<VerdictStatus>().unwrap(), VerdictStatus::NotConfirmed);

    let json = serde_json::to_value(Verdict::Error("timeout".into())).unwrap();
    assert_eq!(json, serde_json::json!({ "status": "error", "reason": "timeout" }));
}

#[test]
fn verdict_filter_matches_run_and_blocks() {
    let pair = CandidatePair::new(tx(150, 0), tx(150, 1), 5, OverlapEvidence::default()).unwrap();
    let record = VerdictRecord {
        run_id: RunId("run-a".into()),
        pair_id: pair.id(),
        block_number: pair.block_number(),
        verdict: Verdict::Confirmed,
        recorded_at: Utc::now(),
        elapsed_ms: 3,
    };

    assert!(VerdictFilter::default().matches(&record));
    assert!(VerdictFilter::for_run(RunId("run-a".into())).matches(&record));
    assert!(!VerdictFilter::for_run(RunId("run-b".into())).matches(&record));

    let inside = VerdictFilter { run_id: None, block_range: Some(BlockRange::new(100, 150).unwrap()) };
    let outside = VerdictFilter { run_id: None, block_range: Some(BlockRange::new(151, 300).unwrap()) };
    assert!(inside.matches(&record));
    assert!(!outside.matches(&record));
}
