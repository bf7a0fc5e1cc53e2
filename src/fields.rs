//! Semantic field identifiers and the canonical-name lookup table.
//!
//! Events store header values in fixed slots addressed by [`EventField`]
//! instead of a free-form map, trading flexibility for O(1) access. Which
//! canonical header name lands in which slot is configuration data, carried
//! by [`FieldTable`] so deployments can swap or extend the mapping without
//! touching the parser.

use std::collections::HashMap;

/// Semantic identifier for a canonical event header slot.
///
/// The discriminant doubles as the slot index inside an
/// [`Event`](crate::Event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum EventField {
    AnswerState,
    Application,
    ApplicationData,
    ApplicationResponse,
    ApplicationUuid,
    CallDirection,
    CallerAni,
    CallerOrigCallerIdNumber,
    CallerDestinationNumber,
    CallerChannelAnsweredTime,
    CallerChannelBridgedTime,
    CallerChannelCreatedTime,
    CallerChannelHangupTime,
    CallerNetworkAddr,
    CallerChannelProgressTime,
    CallerUniqueId,
    ChannelCallState,
    ChannelCallUuid,
    ChannelName,
    ChannelState,
    ChannelStateNumber,
    CoreUuid,
    DtmfDigit,
    CustomHeaders,
    UserToUser,
    EventName,
    EventDateGmt,
    EventDateTimestamp,
    EventSourceIpv4,
    EventSubclass,
    HangupCause,
    OtherLegUniqueId,
    OtherLegDestinationNumber,
    OtherLegChannelAnsweredTime,
    OtherLegChannelName,
    RecordFilePath,
    ReplyText,
    UniqueId,
    VariableCurrentApplication,
    VariableSofiaProfileName,
    VariableDomainName,
    VariableSipCallId,
    VariableSipFullFrom,
    VariableSipFullTo,
    VariableDetectSpeechResult,
    VariableRecordSeconds,
    VariableRecordStereo,
    VariableSipInviteFailureStatus,
    VariableDuration,
    VariableSipHXInfo,
    VariableDtmfResult,
    VariableDtmfResultInvalid,
    VariableBillsec,
    VariablePlaybackTerminatorUsed,
    VariableParentVerb,
    VariableParentId,
    VariableQueueId,
    VariableOriginateSignalBond,
    InstanceHashId,

    // Conference
    Action,
    ConferenceName,
    ConferenceSize,
    ConferenceUniqueId,
    Floor,
    Hear,
    Hold,
    MemberId,
    MemberType,
    MuteDetect,
    Talking,
    Speak,
    ConfRecPath,
    MillisecondsElapsed,
}

impl EventField {
    /// Number of field slots; sizes the per-event storage.
    pub const COUNT: usize = EventField::MillisecondsElapsed as usize + 1;

    /// Slot index for this field.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Field for a slot index, or `None` when the index is out of range.
    pub fn from_index(index: usize) -> Option<EventField> {
        ALL_FIELDS.get(index).copied()
    }
}

/// Every field in slot order; the array length pins it to [`EventField::COUNT`].
const ALL_FIELDS: [EventField; EventField::COUNT] = [
    EventField::AnswerState,
    EventField::Application,
    EventField::ApplicationData,
    EventField::ApplicationResponse,
    EventField::ApplicationUuid,
    EventField::CallDirection,
    EventField::CallerAni,
    EventField::CallerOrigCallerIdNumber,
    EventField::CallerDestinationNumber,
    EventField::CallerChannelAnsweredTime,
    EventField::CallerChannelBridgedTime,
    EventField::CallerChannelCreatedTime,
    EventField::CallerChannelHangupTime,
    EventField::CallerNetworkAddr,
    EventField::CallerChannelProgressTime,
    EventField::CallerUniqueId,
    EventField::ChannelCallState,
    EventField::ChannelCallUuid,
    EventField::ChannelName,
    EventField::ChannelState,
    EventField::ChannelStateNumber,
    EventField::CoreUuid,
    EventField::DtmfDigit,
    EventField::CustomHeaders,
    EventField::UserToUser,
    EventField::EventName,
    EventField::EventDateGmt,
    EventField::EventDateTimestamp,
    EventField::EventSourceIpv4,
    EventField::EventSubclass,
    EventField::HangupCause,
    EventField::OtherLegUniqueId,
    EventField::OtherLegDestinationNumber,
    EventField::OtherLegChannelAnsweredTime,
    EventField::OtherLegChannelName,
    EventField::RecordFilePath,
    EventField::ReplyText,
    EventField::UniqueId,
    EventField::VariableCurrentApplication,
    EventField::VariableSofiaProfileName,
    EventField::VariableDomainName,
    EventField::VariableSipCallId,
    EventField::VariableSipFullFrom,
    EventField::VariableSipFullTo,
    EventField::VariableDetectSpeechResult,
    EventField::VariableRecordSeconds,
    EventField::VariableRecordStereo,
    EventField::VariableSipInviteFailureStatus,
    EventField::VariableDuration,
    EventField::VariableSipHXInfo,
    EventField::VariableDtmfResult,
    EventField::VariableDtmfResultInvalid,
    EventField::VariableBillsec,
    EventField::VariablePlaybackTerminatorUsed,
    EventField::VariableParentVerb,
    EventField::VariableParentId,
    EventField::VariableQueueId,
    EventField::VariableOriginateSignalBond,
    EventField::InstanceHashId,
    EventField::Action,
    EventField::ConferenceName,
    EventField::ConferenceSize,
    EventField::ConferenceUniqueId,
    EventField::Floor,
    EventField::Hear,
    EventField::Hold,
    EventField::MemberId,
    EventField::MemberType,
    EventField::MuteDetect,
    EventField::Talking,
    EventField::Speak,
    EventField::ConfRecPath,
    EventField::MillisecondsElapsed,
];

/// Canonical-header-name to field-slot mapping, plus the prefix that marks
/// pass-through custom headers.
///
/// The default table mirrors the switch's stock header vocabulary. Callers
/// may build their own to track additional headers or a different custom
/// prefix; the parser treats the table as opaque configuration.
#[derive(Debug, Clone)]
pub struct FieldTable {
    map: HashMap<&'static str, EventField>,
    custom_prefix: &'static str,
}

impl FieldTable {
    /// Build a table from explicit entries.
    pub fn new(entries: &[(&'static str, EventField)], custom_prefix: &'static str) -> Self {
        Self {
            map: entries.iter().copied().collect(),
            custom_prefix,
        }
    }

    /// Resolve a canonical header name to its field slot.
    pub fn resolve(&self, canonical_key: &str) -> Option<EventField> {
        self.map.get(canonical_key).copied()
    }

    /// Prefix (in canonical form) marking headers aggregated into the
    /// custom-headers slot instead of being dropped.
    pub fn custom_prefix(&self) -> &str {
        self.custom_prefix
    }
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD_ENTRIES, "Variable_sip_h_")
    }
}

/// Stock canonical-name → field mapping.
const DEFAULT_FIELD_ENTRIES: &[(&str, EventField)] = &[
    ("Answer-State", EventField::AnswerState),
    ("Application", EventField::Application),
    ("Application-Data", EventField::ApplicationData),
    ("Application-Response", EventField::ApplicationResponse),
    ("Application-Uuid", EventField::ApplicationUuid),
    ("Call-Direction", EventField::CallDirection),
    ("Caller-Ani", EventField::CallerAni),
    ("Caller-Orig-Caller-Id-Number", EventField::CallerOrigCallerIdNumber),
    ("Caller-Destination-Number", EventField::CallerDestinationNumber),
    ("Caller-Channel-Answered-Time", EventField::CallerChannelAnsweredTime),
    ("Caller-Channel-Bridged-Time", EventField::CallerChannelBridgedTime),
    ("Caller-Channel-Created-Time", EventField::CallerChannelCreatedTime),
    ("Caller-Channel-Hangup-Time", EventField::CallerChannelHangupTime),
    ("Caller-Network-Addr", EventField::CallerNetworkAddr),
    ("Caller-Channel-Progress-Time", EventField::CallerChannelProgressTime),
    ("Caller-Unique-Id", EventField::CallerUniqueId),
    ("Channel-Call-State", EventField::ChannelCallState),
    ("Channel-Call-Uuid", EventField::ChannelCallUuid),
    ("Channel-Name", EventField::ChannelName),
    ("Channel-State", EventField::ChannelState),
    ("Channel-State-Number", EventField::ChannelStateNumber),
    ("Core-Uuid", EventField::CoreUuid),
    ("Dtmf-Digit", EventField::DtmfDigit),
    ("Custom-Headers", EventField::CustomHeaders),
    ("Variable_sip_h_user-to-user", EventField::UserToUser),
    ("Event-Name", EventField::EventName),
    ("Event-Date-Gmt", EventField::EventDateGmt),
    ("Event-Date-Timestamp", EventField::EventDateTimestamp),
    ("Freeswitch-Ipv4", EventField::EventSourceIpv4),
    ("Event-Subclass", EventField::EventSubclass),
    ("Hangup-Cause", EventField::HangupCause),
    ("Other-Leg-Unique-Id", EventField::OtherLegUniqueId),
    ("Other-Leg-Destination-Number", EventField::OtherLegDestinationNumber),
    ("Other-Leg-Channel-Answered-Time", EventField::OtherLegChannelAnsweredTime),
    ("Other-Leg-Channel-Name", EventField::OtherLegChannelName),
    ("Record-File-Path", EventField::RecordFilePath),
    ("Reply-Text", EventField::ReplyText),
    ("Unique-Id", EventField::UniqueId),
    ("Variable_current_application", EventField::VariableCurrentApplication),
    ("Variable_sofia_profile_name", EventField::VariableSofiaProfileName),
    ("Variable_domain_name", EventField::VariableDomainName),
    ("Variable_sip_call_id", EventField::VariableSipCallId),
    ("Variable_sip_full_from", EventField::VariableSipFullFrom),
    ("Variable_sip_full_to", EventField::VariableSipFullTo),
    ("Variable_detect_speech_result", EventField::VariableDetectSpeechResult),
    ("Variable_record_seconds", EventField::VariableRecordSeconds),
    ("Variable_record_stereo", EventField::VariableRecordStereo),
    ("Variable_sip_invite_failure_status", EventField::VariableSipInviteFailureStatus),
    ("Variable_duration", EventField::VariableDuration),
    ("Variable_sip_h_x-info", EventField::VariableSipHXInfo),
    ("Variable_dtmfresultvar", EventField::VariableDtmfResult),
    ("Variable_dtmfresultvar_invalid", EventField::VariableDtmfResultInvalid),
    ("Variable_billsec", EventField::VariableBillsec),
    ("Variable_playback_terminator_used", EventField::VariablePlaybackTerminatorUsed),
    ("Variable_parent_verb", EventField::VariableParentVerb),
    ("Variable_parent_id", EventField::VariableParentId),
    ("Variable_queue_id", EventField::VariableQueueId),
    ("Variable_originate_signal_bond", EventField::VariableOriginateSignalBond),
    ("Variable_instance_hash", EventField::InstanceHashId),
    // Conference
    ("Action", EventField::Action),
    ("Conference-Name", EventField::ConferenceName),
    ("Conference-Size", EventField::ConferenceSize),
    ("Conference-Unique-Id", EventField::ConferenceUniqueId),
    ("Floor", EventField::Floor),
    ("Hear", EventField::Hear),
    ("Hold", EventField::Hold),
    ("Member-Id", EventField::MemberId),
    ("Membertype", EventField::MemberType),
    ("Mutedetect", EventField::MuteDetect),
    ("Talking", EventField::Talking),
    ("Speak", EventField::Speak),
    ("Path", EventField::ConfRecPath),
    ("Milliseconds-Elapsed", EventField::MillisecondsElapsed),
];
