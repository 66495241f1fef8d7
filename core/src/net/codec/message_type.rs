//! Message kind tags

macro_rules! message_types {
    ($($(#[$meta:meta])* $name:ident = $tag:literal,)+) => {
        /// Kind of a message envelope, carried as a one-byte tag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum MessageType {
            $($(#[$meta])* $name = $tag,)+
        }

        impl MessageType {
            /// Every known kind, in tag order
            pub const ALL: &'static [MessageType] = &[$(MessageType::$name,)+];

            /// Look up a kind by its wire tag
            pub const fn from_tag(tag: u8) -> Option<Self> {
                match tag {
                    $($tag => Some(Self::$name),)+
                    _ => None,
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)+
                }
            }
        }
    };
}

message_types! {
    // Session control
    /// Full session configuration snapshot
    Options = 1,
    /// A peer is leaving on its own
    Leaving = 2,
    /// Host removes a slot
    Kick = 3,
    /// Host refuses a connecting peer before assigning a slot
    JoinRejected = 4,
    /// A joining peer acknowledges options receipt
    PlayerResponding = 5,
    /// Build fingerprint sent to the host after joining
    VersionCheck = 6,
    ColourRequest = 7,
    TeamRequest = 8,
    ReadyRequest = 9,
    /// Host starts the game
    FireUp = 10,
    RequestMap = 11,
    FileChunk = 12,
    Text = 13,
    AiText = 14,
    Beacon = 15,
    Ping = 16,
    Pong = 17,
    AudioStream = 18,

    // Simulation traffic, passed through to the game untouched
    Droid = 32,
    DroidInfo = 33,
    DroidDestroy = 34,
    DroidMove = 35,
    GroupOrder = 36,
    CheckDroid = 37,
    CheckStructure = 38,
    CheckPower = 39,
    Build = 40,
    BuildFinished = 41,
    StructureDestroy = 42,
    Secondary = 43,
    SecondaryAll = 44,
    DroidEmbark = 45,
    DroidDisembark = 46,
    RequestDroid = 47,
    Gift = 48,
    ScoreSubmit = 49,
    Vtol = 50,
    LasSat = 51,
    Template = 52,
    TemplateDestroy = 53,
    FeatureDestroy = 54,
    Demolish = 55,
    Research = 56,
    ResearchStatus = 57,
    WholeDroid = 58,
    Artifacts = 59,
    Features = 60,
    Alliance = 61,
}

/// First tag of the simulation range
const GAME_TRAFFIC_START: u8 = 32;

impl MessageType {
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Kinds sent in the clear even when obfuscation is on
    pub const fn is_obfuscation_exempt(self) -> bool {
        matches!(self, Self::FileChunk | Self::AudioStream)
    }

    /// Simulation kinds the session layer forwards without interpreting
    pub const fn is_game_traffic(self) -> bool {
        self.tag() >= GAME_TRAFFIC_START
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
