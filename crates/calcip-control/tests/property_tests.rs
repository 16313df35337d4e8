//! 控制核心的属性测试
//!
//! 使用 proptest 验证振幅预算、BPM 限幅、截止时间调度、姿态往返与振荡周期性。

use calcip_control::{
    Axis, AxisArray, Clock, DeadlineScheduler, MotionParameters, Oscillator, PoseSequencer,
    PoseTarget, SafetyPolicy, Setpoint, VirtualClock, WaveParams, clamp_bpm, compose,
    validate_motion,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

fn oscillator() -> impl Strategy<Value = Oscillator> {
    (0usize..4).prop_map(|i| Oscillator::ALL[i])
}

proptest! {
    /// 振幅预算：|amplitude| + |offset| 超出预算的参数一律在第一个 tick 之前被拒绝
    #[test]
    fn amplitude_budget_enforced(
        amplitude in -1.0..1.0f64,
        offset in -0.5..0.5f64,
        axis_index in 0usize..3,
    ) {
        let axis = Axis::ALL[axis_index];
        let mut params = MotionParameters::default();
        params.wave.amplitude = AxisArray::splat(0.3);
        params.wave.amplitude[axis] = amplitude;
        params.wave.offset[axis] = offset;

        let policy = SafetyPolicy::oscillation();
        let result = validate_motion(&params, &policy);
        if amplitude.abs() + offset.abs() > policy.amplitude_budget {
            prop_assert!(result.is_err());
        } else {
            let plan = result.unwrap().value;
            for axis in Axis::ALL {
                let wave = plan.wave();
                prop_assert!(
                    wave.amplitude[axis].abs() + wave.offset[axis].abs() <= policy.amplitude_budget
                );
            }
        }
    }

    /// BPM 限幅必然收敛，结果不超过上限
    #[test]
    fn bpm_clamp_converges(bpm in 0.01..100_000.0f64, limiter in 1.0..500.0f64) {
        let clamped = clamp_bpm(bpm, limiter).unwrap();
        prop_assert!(clamped <= limiter);
        if bpm > limiter {
            prop_assert!(clamped > limiter / 2.0);
        } else {
            prop_assert_eq!(clamped, bpm);
        }
    }

    /// 截止时间调度：第 i 个 tick 之后经过的时间不少于 i * sleep_rate，睡眠时长不超过一个周期
    #[test]
    fn deadline_pacing_never_drifts(
        sleep_rate in 0.001..0.1f64,
        work_ratio in 0.0..2.0f64,
        ticks in 1u64..60,
    ) {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_millis(3));
        let mut scheduler = DeadlineScheduler::start(&clock, sleep_rate);
        clock.set_auto_advance(Duration::from_secs_f64(sleep_rate * work_ratio));

        let period = Duration::from_secs_f64(sleep_rate) + Duration::from_nanos(2);
        for tick in 1..=ticks {
            let _ = clock.now();
            let slept = scheduler.wait_for_tick(&clock, tick);
            prop_assert!(slept <= period);
            prop_assert!(scheduler.elapsed(&clock) >= Duration::from_secs_f64(tick as f64 * sleep_rate));
        }
        if work_ratio < 0.3 {
            prop_assert_eq!(scheduler.overruns(), 0);
        }
    }

    /// 无抖动时返回段是接近段的逆序，最后一个设定值回到中立姿态
    #[test]
    fn pose_round_trip_is_mirror(
        roll in -0.5..0.5f64,
        pitch in -0.5..0.5f64,
        yaw in -0.3..0.3f64,
        body_height in -0.25..0.2f64,
        steps in 1usize..400,
        hold in 0usize..50,
        seed in any::<u64>(),
    ) {
        let target = PoseTarget {
            euler: AxisArray::new([roll, pitch, yaw]),
            body_height,
        };
        let sequencer = PoseSequencer::new(target, 200, steps, hold, 0.0, false);
        let sequence = sequencer.sequence(&mut StdRng::seed_from_u64(seed));

        let returned: Vec<Setpoint> = sequence.return_path().copied().collect();
        let mirrored: Vec<Setpoint> = returned.into_iter().rev().collect();
        prop_assert_eq!(mirrored.as_slice(), sequence.approach());

        let emitted: Vec<Setpoint> = sequence.map(|(_, setpoint)| setpoint).collect();
        prop_assert_eq!(emitted.len(), 2 * steps + hold);
        prop_assert_eq!(emitted.last().copied(), Some(Setpoint::NEUTRAL));
    }

    /// 相隔一个完整周期的两个 tick 取值相同
    #[test]
    fn oscillator_is_periodic(
        amplitude in -0.55..0.55f64,
        period in 1u32..=16,
        publish_hz in 50u32..=1000,
        t in 0u64..5_000,
        osc in oscillator(),
    ) {
        let wave = WaveParams {
            amplitude: AxisArray::splat(amplitude),
            period: AxisArray::splat(f64::from(period)),
            oscillator: AxisArray::splat(osc),
            ..WaveParams::default()
        };
        let shift = u64::from(period) * u64::from(publish_hz);
        let a = compose(&wave, t, publish_hz);
        let b = compose(&wave, t + shift, publish_hz);
        for axis in Axis::ALL {
            prop_assert!((a[axis] - b[axis]).abs() < 1e-9);
        }
    }

    /// 关闭的轴在任何 tick 都输出 0
    #[test]
    fn disabled_axis_is_zero(
        amplitude in -1.0..1.0f64,
        offset in -1.0..1.0f64,
        period in 0.5..16.0f64,
        phase in -2.0..2.0f64,
        axis_index in 0usize..3,
        t in 0u64..100_000,
        osc in oscillator(),
    ) {
        let axis = Axis::ALL[axis_index];
        let mut wave = WaveParams {
            amplitude: AxisArray::splat(amplitude),
            offset: AxisArray::splat(offset),
            period: AxisArray::splat(period),
            phase: AxisArray::splat(phase),
            oscillator: AxisArray::splat(osc),
            ..WaveParams::default()
        };
        wave.enabled[axis] = false;
        prop_assert_eq!(compose(&wave, t, 200)[axis], 0.0);
    }
}

#[test]
fn test_bpm_240_clamped_twice() {
    assert_eq!(clamp_bpm(240.0, 60.0).unwrap(), 60.0);
}
