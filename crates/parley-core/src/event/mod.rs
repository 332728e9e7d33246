//! Gateway events.
//!
//! # Module Structure
//!
//! - `raw`: events as the gateway delivers them (`RawEvent`)
//! - `inbound`: validated, classified events (`InboundEvent`)

mod inbound;
mod raw;

pub use inbound::{
    AvatarName, AvatarProperties, ChatEvent, ConnectionEvent, DirectMessageEvent,
    GroupMessageEvent, GroupName, InboundEvent, MemberInfo, NameResolvedEvent, NearbyAvatar,
    RosterEvent, SessionResolvedEvent, TypingEvent, TypingScope,
};
pub use raw::{
    ChatSource, RawAvatarName, RawEvent, RawGroupName, RawMember, RawNearbyAvatar,
    RawTypingScope,
};
