use proptest::prelude::*;
use voipmon_quality_core::{MosCalculator, QualityCategory, MAX_MOS, MIN_MOS};

const CODECS: [&str; 9] = [
    "G.711", "G.729", "G.729A", "G.723.1", "GSM", "iLBC", "Opus", "Unknown", "bogus",
];

proptest! {
    #[test]
    fn mos_is_always_in_range(
        loss in -10.0f64..200.0,
        jitter in -10.0f64..1000.0,
        delay in -10.0f64..2000.0,
        codec in 0usize..CODECS.len(),
    ) {
        let mos = MosCalculator::calculate_mos(loss, jitter, delay, CODECS[codec]);
        prop_assert!(mos >= MIN_MOS && mos <= MAX_MOS, "mos = {}", mos);
    }

    #[test]
    fn more_loss_never_raises_mos(
        loss in 0.0f64..100.0,
        extra in 0.0f64..100.0,
        jitter in 0.0f64..200.0,
        delay in 0.0f64..500.0,
        codec in 0usize..CODECS.len(),
    ) {
        let low = MosCalculator::calculate_mos(loss, jitter, delay, CODECS[codec]);
        let high = MosCalculator::calculate_mos(loss + extra, jitter, delay, CODECS[codec]);
        prop_assert!(high <= low, "loss {} -> {}, {} -> {}", loss, low, loss + extra, high);
    }

    #[test]
    fn clean_g711_is_excellent(delay in 0.0f64..=100.0) {
        let mos = MosCalculator::calculate_mos(0.0, 0.0, delay, "G.711");
        prop_assert!(mos >= 4.0);
        prop_assert_eq!(QualityCategory::from_mos(mos), QualityCategory::Excellent);
    }
}
