use pagewise::prelude::*;
use pagewise_mem::{InMemoryEventChannel, InMemoryPageSource};

#[derive(Debug, Clone, PartialEq)]
enum Role {
    Creator,
    Member,
}

#[derive(Debug, Clone, Keyed, Patchable)]
#[serde(rename_all = "camelCase")]
struct ChatRoom {
    #[key]
    id: u32,
    title: String,
    owner_is_me: bool,
    last_message: String,
}

fn room(id: u32, title: &str, owner_is_me: bool) -> ChatRoom {
    ChatRoom {
        id,
        title: title.to_string(),
        owner_is_me,
        last_message: String::new(),
    }
}

fn print_rooms(label: &str, controller: &PaginationController<InMemoryPageSource<ChatRoom, Role>>) {
    println!("{label}:");
    controller.with_data(|rooms| {
        for room in rooms {
            println!("  #{} {} {:?}", room.id, room.title, room.last_message);
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let source = InMemoryPageSource::new(vec![
        room(1, "Design reviews", true),
        room(2, "Launch party", false),
        room(3, "Weekly sync", true),
        room(4, "Book club", false),
        room(5, "Support", true),
    ])
    .with_matcher(|role: &Role, room: &ChatRoom| match role {
        Role::Creator => room.owner_is_me,
        Role::Member => true,
    });

    let config = SessionConfig::default()
        .with_page_size(2)
        .with_ordering(OrderingPolicy::RecencyFirst)
        .with_filter(|role: &Role, room: &ChatRoom| *role == Role::Member || room.owner_is_me);
    let controller = PaginationController::new(source, config);

    controller.start(Role::Creator);
    controller.load_more().await?;
    print_rooms("First page", &controller);

    let channel = InMemoryEventChannel::new();
    let feed = LiveFeed::spawn(controller.clone(), channel.subscribe().ok_or("already subscribed")?);

    channel.publish(
        LiveEvent::changed(
            3,
            ChatRoomPatch {
                last_message: Some("hi".to_string()),
                ..Default::default()
            },
        )
        .with_recency(),
    )?;
    channel.publish(LiveEvent::created(
        6,
        ChatRoomPatch {
            id: Some(6),
            title: Some("Someone else's room".to_string()),
            owner_is_me: Some(false),
            last_message: Some(String::new()),
        },
    ))?;
    channel.publish(LiveEvent::created(
        7,
        ChatRoomPatch {
            id: Some(7),
            title: Some("Fresh room".to_string()),
            owner_is_me: Some(true),
            last_message: Some("welcome".to_string()),
        },
    ))?;
    channel.close();
    let applied = feed.join().await?;
    println!("Applied {applied} live event(s)");
    print_rooms("After live events", &controller);

    while controller.has_more() {
        controller.load_more().await?;
    }
    print_rooms("Fully loaded", &controller);

    controller.set_params(Role::Member);
    controller.load_more().await?;
    print_rooms("Member view, first page", &controller);

    Ok(())
}
