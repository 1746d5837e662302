//! Protocol module containing the change-notification envelope and its codec.

pub mod notification;

pub use notification::{
    decode_notification, encode_notification, ChangeNotification, NotificationError, WindowId,
    CONFIG_UPDATE_TOPIC,
};
