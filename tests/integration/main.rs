mod mock_feed;
mod workflow;
