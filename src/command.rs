//! Command encoding for the Jumping Sumo's discrete command vocabulary.
//!
//! Everything here is pure: intents go in, clamped parameters and wire
//! payloads come out. The payload layout is the device's project/class/command
//! framing (`project`, `class`, `command` little-endian u16, then arguments);
//! sequence numbers and link headers belong to the transport, not to us.
//!
//! Range policy: out-of-range speed/turn values are clamped into [-100, 100]
//! rather than rejected. The tool layer above owns strict validation; a
//! slightly-out-of-range value from a caller should still drive the robot.
//! Unrecognized action *names* are different: those are caller bugs and fail
//! with [`RobotError::UnknownAction`].

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::TICK_INTERVAL;
use crate::error::RobotError;

/// ARSDK project id for the Jumping Sumo family.
pub const PROJECT_JUMPING_SUMO: u8 = 3;

/// Outbound buffer for non-acknowledged piloting traffic.
pub const BUFFER_PILOTING: u8 = 10;

/// Outbound buffer for acknowledged event commands.
pub const BUFFER_COMMANDS: u8 = 11;

mod class {
    pub const PILOTING: u8 = 0;
    pub const ANIMATIONS: u8 = 2;
    pub const MEDIA_RECORD: u8 = 6;
}

mod piloting {
    pub const PCMD: u16 = 0;
    pub const POSTURE: u16 = 1;
}

mod animations {
    pub const JUMP_STOP: u16 = 0;
    pub const JUMP_CANCEL: u16 = 1;
    pub const JUMP_LOAD: u16 = 2;
    pub const JUMP: u16 = 3;
    pub const SIMPLE_ANIMATION: u16 = 4;
}

mod media_record {
    pub const PICTURE: u16 = 0;
}

/// A command encoded for the wire, ready for the transport to frame and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    /// Whether the device must acknowledge this command.
    pub needs_ack: bool,
    /// Outbound buffer id ([`BUFFER_PILOTING`] or [`BUFFER_COMMANDS`]).
    pub buffer: u8,
    /// Project/class/command header plus arguments.
    pub payload: Vec<u8>,
}

fn encode(needs_ack: bool, buffer: u8, class: u8, command: u16, args: &[u8]) -> EncodedCommand {
    let mut payload = Vec::with_capacity(4 + args.len());
    payload.push(PROJECT_JUMPING_SUMO);
    payload.push(class);
    payload.extend_from_slice(&command.to_le_bytes());
    payload.extend_from_slice(args);
    EncodedCommand { needs_ack, buffer, payload }
}

/// A continuous movement command.
///
/// Immutable once built; the session re-sends it every tick for `duration`
/// because a single send does not hold the motor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionCommand {
    speed: i8,
    turn: i8,
    duration: Duration,
}

impl MotionCommand {
    /// Build a motion command, clamping speed and turn into [-100, 100] and
    /// raising the duration to at least one tick interval.
    pub fn new(speed: i32, turn: i32, duration: Duration) -> Self {
        Self {
            speed: speed.clamp(-100, 100) as i8,
            turn: turn.clamp(-100, 100) as i8,
            duration: duration.max(TICK_INTERVAL),
        }
    }

    /// The neutral "hold position" command the keepalive scheduler emits.
    pub const fn neutral() -> Self {
        Self { speed: 0, turn: 0, duration: TICK_INTERVAL }
    }

    /// Forward/backward speed in [-100, 100].
    pub fn speed(&self) -> i8 {
        self.speed
    }

    /// Turn rate in [-100, 100].
    pub fn turn(&self) -> i8 {
        self.turn
    }

    /// How long the session asserts this command.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Encode as a piloting PCMD: touch flag, speed, turn.
    pub fn encode(&self) -> EncodedCommand {
        let args = [1u8, self.speed as u8, self.turn as u8];
        encode(false, BUFFER_PILOTING, class::PILOTING, piloting::PCMD, &args)
    }
}

/// Jump styles the spring mechanism supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JumpKind {
    /// Maximum distance.
    Long,
    /// Maximum height.
    High,
}

impl JumpKind {
    fn value(self) -> u32 {
        match self {
            JumpKind::Long => 0,
            JumpKind::High => 1,
        }
    }
}

impl FromStr for JumpKind {
    type Err = RobotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(JumpKind::Long),
            "high" => Ok(JumpKind::High),
            other => Err(RobotError::unknown_action("jump kind", other)),
        }
    }
}

/// Physical stances of the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureKind {
    /// Normal driving mode.
    Standing,
    /// Jump-ready position.
    Jumper,
    /// Kicking stance, front accessory active.
    Kicker,
}

impl PostureKind {
    fn value(self) -> u32 {
        match self {
            PostureKind::Standing => 0,
            PostureKind::Jumper => 1,
            PostureKind::Kicker => 2,
        }
    }
}

impl FromStr for PostureKind {
    type Err = RobotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standing" => Ok(PostureKind::Standing),
            "jumper" => Ok(PostureKind::Jumper),
            "kicker" => Ok(PostureKind::Kicker),
            other => Err(RobotError::unknown_action("posture", other)),
        }
    }
}

/// Built-in animation routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationKind {
    Stop,
    Spin,
    Tap,
    SlowShake,
    Metronome,
    Ondulation,
    SpinJump,
    SpinToPosture,
    Spiral,
    Slalom,
}

impl AnimationKind {
    fn value(self) -> u32 {
        match self {
            AnimationKind::Stop => 0,
            AnimationKind::Spin => 1,
            AnimationKind::Tap => 2,
            AnimationKind::SlowShake => 3,
            AnimationKind::Metronome => 4,
            AnimationKind::Ondulation => 5,
            AnimationKind::SpinJump => 6,
            AnimationKind::SpinToPosture => 7,
            AnimationKind::Spiral => 8,
            AnimationKind::Slalom => 9,
        }
    }
}

impl FromStr for AnimationKind {
    type Err = RobotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(AnimationKind::Stop),
            "spin" => Ok(AnimationKind::Spin),
            "tap" => Ok(AnimationKind::Tap),
            "slowshake" => Ok(AnimationKind::SlowShake),
            "metronome" => Ok(AnimationKind::Metronome),
            "ondulation" => Ok(AnimationKind::Ondulation),
            "spinjump" => Ok(AnimationKind::SpinJump),
            "spintoposture" => Ok(AnimationKind::SpinToPosture),
            "spiral" => Ok(AnimationKind::Spiral),
            "slalom" => Ok(AnimationKind::Slalom),
            other => Err(RobotError::unknown_action("animation", other)),
        }
    }
}

/// Fire-and-forget device actions: sent once, never held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscreteAction {
    Jump(JumpKind),
    /// Compress the spring without firing it.
    LoadJump,
    /// Abort a loaded jump and return to the previous state.
    CancelJump,
    /// Emergency stop for the jump motor.
    StopJump,
    /// Fire the spring from kicker posture. Same opcode as a jump; the
    /// posture decides whether the robot jumps or kicks.
    Kick,
    LoadKick,
    Posture(PostureKind),
    Animation(AnimationKind),
    /// Store a photo on the device's internal storage.
    CapturePhoto,
}

impl DiscreteAction {
    /// Encode this action into the device's command vocabulary.
    pub fn encode(&self) -> EncodedCommand {
        match self {
            DiscreteAction::Jump(kind) => encode(
                true,
                BUFFER_COMMANDS,
                class::ANIMATIONS,
                animations::JUMP,
                &kind.value().to_le_bytes(),
            ),
            DiscreteAction::LoadJump | DiscreteAction::LoadKick => {
                encode(true, BUFFER_COMMANDS, class::ANIMATIONS, animations::JUMP_LOAD, &[])
            }
            DiscreteAction::CancelJump => {
                encode(true, BUFFER_COMMANDS, class::ANIMATIONS, animations::JUMP_CANCEL, &[])
            }
            DiscreteAction::StopJump => {
                encode(true, BUFFER_COMMANDS, class::ANIMATIONS, animations::JUMP_STOP, &[])
            }
            DiscreteAction::Kick => encode(
                true,
                BUFFER_COMMANDS,
                class::ANIMATIONS,
                animations::JUMP,
                &JumpKind::Long.value().to_le_bytes(),
            ),
            DiscreteAction::Posture(kind) => encode(
                true,
                BUFFER_PILOTING,
                class::PILOTING,
                piloting::POSTURE,
                &kind.value().to_le_bytes(),
            ),
            DiscreteAction::Animation(kind) => encode(
                true,
                BUFFER_COMMANDS,
                class::ANIMATIONS,
                animations::SIMPLE_ANIMATION,
                &kind.value().to_le_bytes(),
            ),
            // Mass-storage id 0 (internal storage)
            DiscreteAction::CapturePhoto => {
                encode(true, BUFFER_COMMANDS, class::MEDIA_RECORD, media_record::PICTURE, &[0u8])
            }
        }
    }
}

/// Anything the session can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotCommand {
    Motion(MotionCommand),
    Action(DiscreteAction),
}

impl RobotCommand {
    pub fn encode(&self) -> EncodedCommand {
        match self {
            RobotCommand::Motion(motion) => motion.encode(),
            RobotCommand::Action(action) => action.encode(),
        }
    }
}

impl From<MotionCommand> for RobotCommand {
    fn from(motion: MotionCommand) -> Self {
        RobotCommand::Motion(motion)
    }
}

impl From<DiscreteAction> for RobotCommand {
    fn from(action: DiscreteAction) -> Self {
        RobotCommand::Action(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn out_of_range_motion_clamps_instead_of_rejecting() {
        let clamped = MotionCommand::new(150, -300, Duration::from_secs(1));
        let bounded = MotionCommand::new(100, -100, Duration::from_secs(1));
        assert_eq!(clamped.encode(), bounded.encode());
    }

    proptest! {
        #[test]
        fn motion_parameters_always_land_in_range(
            speed in -1000i32..1000,
            turn in -1000i32..1000,
            millis in 0u64..10_000
        ) {
            let command = MotionCommand::new(speed, turn, Duration::from_millis(millis));
            prop_assert!((-100..=100).contains(&command.speed()));
            prop_assert!((-100..=100).contains(&command.turn()));
            prop_assert!(command.duration() >= TICK_INTERVAL);

            // Encoding a pre-clamped copy is identical
            let clamped = MotionCommand::new(
                speed.clamp(-100, 100),
                turn.clamp(-100, 100),
                Duration::from_millis(millis),
            );
            prop_assert_eq!(command.encode(), clamped.encode());
        }
    }

    #[test]
    fn pcmd_wire_layout() {
        let encoded = MotionCommand::new(50, -25, Duration::from_secs(1)).encode();
        assert!(!encoded.needs_ack);
        assert_eq!(encoded.buffer, BUFFER_PILOTING);
        // project, class, command LE, flag, speed, turn
        assert_eq!(encoded.payload, vec![3, 0, 0, 0, 1, 50u8, (-25i8) as u8]);
    }

    #[test]
    fn jump_wire_layout() {
        let encoded = DiscreteAction::Jump(JumpKind::High).encode();
        assert!(encoded.needs_ack);
        assert_eq!(encoded.buffer, BUFFER_COMMANDS);
        assert_eq!(encoded.payload, vec![3, 2, 3, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn posture_goes_on_piloting_buffer_with_ack() {
        let encoded = DiscreteAction::Posture(PostureKind::Kicker).encode();
        assert!(encoded.needs_ack);
        assert_eq!(encoded.buffer, BUFFER_PILOTING);
        assert_eq!(encoded.payload, vec![3, 0, 1, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn kick_reuses_jump_opcode_and_load_kick_reuses_jump_load() {
        assert_eq!(DiscreteAction::Kick.encode(), DiscreteAction::Jump(JumpKind::Long).encode());
        assert_eq!(DiscreteAction::LoadKick.encode(), DiscreteAction::LoadJump.encode());
    }

    #[test]
    fn capture_photo_targets_internal_storage() {
        let encoded = DiscreteAction::CapturePhoto.encode();
        assert_eq!(encoded.payload, vec![3, 6, 0, 0, 0]);
    }

    #[test]
    fn neutral_command_is_full_stop() {
        let neutral = MotionCommand::neutral();
        assert_eq!(neutral.speed(), 0);
        assert_eq!(neutral.turn(), 0);
        assert_eq!(neutral.duration(), TICK_INTERVAL);
    }

    #[test]
    fn known_names_parse_to_their_kinds() {
        assert_eq!("high".parse::<JumpKind>().unwrap(), JumpKind::High);
        assert_eq!("kicker".parse::<PostureKind>().unwrap(), PostureKind::Kicker);
        assert_eq!("spintoposture".parse::<AnimationKind>().unwrap(), AnimationKind::SpinToPosture);
    }

    #[test]
    fn unknown_names_fail_with_unknown_action() {
        for result in [
            "sideways".parse::<JumpKind>().err(),
            "crouching".parse::<PostureKind>().err(),
            "moonwalk".parse::<AnimationKind>().err(),
        ] {
            match result.expect("parse should fail") {
                RobotError::UnknownAction { name, .. } => assert!(!name.is_empty()),
                other => panic!("expected UnknownAction, got {other:?}"),
            }
        }
    }

    #[test]
    fn every_animation_has_a_distinct_wire_value() {
        let kinds = [
            AnimationKind::Stop,
            AnimationKind::Spin,
            AnimationKind::Tap,
            AnimationKind::SlowShake,
            AnimationKind::Metronome,
            AnimationKind::Ondulation,
            AnimationKind::SpinJump,
            AnimationKind::SpinToPosture,
            AnimationKind::Spiral,
            AnimationKind::Slalom,
        ];
        let mut values: Vec<u32> = kinds.iter().map(|k| k.value()).collect();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), kinds.len());
    }
}
