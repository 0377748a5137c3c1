//! Decisão de histerese – função pura, sem efeitos colaterais.
//!
//! | Estratégia | Off → On              | On → Off                          |
//! |------------|-----------------------|-----------------------------------|
//! | DewSpread  | `spread <= trigger`   | `spread >= trigger + margin`      |
//! | RH         | `rh >= trigger`       | `rh < trigger`                    |
//!
//! O modo RH não tem margem: a assimetria entre as duas estratégias é
//! intencional e reproduz o comportamento das variantes em campo.

use crate::types::{HeaterState, Threshold, ThresholdMode};

/// Próximo estado desejado para `value` (dew spread em °C ou RH em %).
///
/// Entre `trigger` e `trigger + margin` (DewSpread) o estado atual é
/// mantido, evitando chaveamento rápido perto do limiar.
pub fn next_state(current: HeaterState, value: f64, threshold: &Threshold) -> HeaterState {
    let trigger = threshold.trigger_value;
    match (threshold.mode, current) {
        (ThresholdMode::DewSpread, HeaterState::Off) if value <= trigger => HeaterState::On,
        (ThresholdMode::DewSpread, HeaterState::On)
            if value >= trigger + threshold.hysteresis_margin =>
        {
            HeaterState::Off
        }
        (ThresholdMode::RelativeHumidity, HeaterState::Off) if value >= trigger => HeaterState::On,
        (ThresholdMode::RelativeHumidity, HeaterState::On) if value < trigger => HeaterState::Off,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use HeaterState::{Off, On};

    /// Aplica [`next_state`] a uma sequência, supondo que toda transição
    /// é comandada com sucesso.
    fn simulate(start: HeaterState, values: &[f64], threshold: &Threshold) -> Vec<HeaterState> {
        let mut state = start;
        values
            .iter()
            .map(|v| {
                state = next_state(state, *v, threshold);
                state
            })
            .collect()
    }

    #[test]
    fn dewspread_sequence_follows_inequalities() {
        let t = Threshold::dewspread(3.0, 1.0);
        // 3.5 > 3.0 fica Off; 2.9 <= 3.0 liga; 3.2 < 4.0 fica On;
        // 4.5 >= 4.0 desliga; 3.9 > 3.0 fica Off.
        assert_eq!(
            simulate(Off, &[3.5, 2.9, 3.2, 4.5, 3.9], &t),
            vec![Off, On, On, Off, Off]
        );
    }

    #[test]
    fn dewspread_boundaries_are_inclusive() {
        let t = Threshold::dewspread(3.0, 1.0);
        assert_eq!(next_state(Off, 3.0, &t), On);
        assert_eq!(next_state(On, 4.0, &t), Off);
        assert_eq!(next_state(On, 3.999, &t), On);
    }

    #[test]
    fn zero_margin_has_no_dead_zone() {
        let t = Threshold::dewspread(3.0, 0.0);
        assert_eq!(next_state(On, 3.0, &t), Off);
        assert_eq!(next_state(Off, 3.0, &t), On);
    }

    #[test]
    fn rh_sequence_has_no_hysteresis() {
        let t = Threshold::relative_humidity(80.0);
        assert_eq!(
            simulate(Off, &[75.0, 82.0, 79.0, 81.0], &t),
            vec![Off, On, Off, On]
        );
    }

    #[test]
    fn rh_ignores_margin() {
        let mut t = Threshold::relative_humidity(80.0);
        t.hysteresis_margin = 10.0;
        assert_eq!(next_state(On, 79.9, &t), Off);
        assert_eq!(next_state(Off, 80.0, &t), On);
    }

    proptest! {
        #[test]
        fn dead_zone_never_switches(
            trigger in -5.0f64..15.0,
            margin in 0.01f64..5.0,
            frac in 0.001f64..0.999,
        ) {
            let t = Threshold::dewspread(trigger, margin);
            let inside = trigger + margin * frac;
            prop_assert_eq!(next_state(Off, inside, &t), Off);
            prop_assert_eq!(next_state(On, inside, &t), On);
        }

        #[test]
        fn low_spread_always_ends_on(
            trigger in -5.0f64..15.0,
            margin in 0.01f64..5.0,
            below in 0.0f64..10.0,
        ) {
            let t = Threshold::dewspread(trigger, margin);
            for start in [Off, On] {
                prop_assert_eq!(next_state(start, trigger - below, &t), On);
            }
        }
    }
}
